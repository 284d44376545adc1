table! {
    user_inputs (id) {
        id -> Uuid,
        title -> Text,
        age_group -> Text,
        plot -> Text,
        characters -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    stories (id) {
        id -> Uuid,
        user_id -> Text,
        user_input_id -> Uuid,
        cover_image -> Nullable<Text>,
        chapter_count -> Int4,
        created_at -> Timestamptz,
    }
}

table! {
    chapters (id) {
        id -> Uuid,
        story_id -> Uuid,
        user_id -> Text,
        chapter_number -> Int4,
        title -> Text,
        content -> Text,
        image_prompt -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    users (id) {
        id -> Text,
        plan -> Text,
        story_count -> Int4,
        upgraded_at -> Nullable<Timestamptz>,
        polar_customer_id -> Nullable<Text>,
    }
}

allow_tables_to_appear_in_same_query!(
    user_inputs,
    stories,
    chapters,
    users,
);
