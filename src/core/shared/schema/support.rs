diesel::table! {
    tickets (id) {
        id -> Int4,
        user_id -> Int8,
        username -> Nullable<Varchar>,
        category -> Varchar,
        message -> Nullable<Text>,
        response -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        status -> Varchar,
    }
}
