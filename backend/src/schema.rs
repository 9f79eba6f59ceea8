diesel::table! {
    users (id) {
        id -> Text,
        name -> Text,
        email -> Text,
        phone -> Text,
        password_hash -> Text,
        role -> Text,
        security_key -> Nullable<Text>,
        is_active -> Bool,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    pending_users (id) {
        id -> Text,
        email -> Text,
        name -> Nullable<Text>,
        phone -> Nullable<Text>,
        password_hash -> Nullable<Text>,
        role -> Nullable<Text>,
        purpose -> Text,
        otp_code -> Text,
        otp_expires_at -> Datetime,
        created_at -> Datetime,
    }
}

diesel::table! {
    properties (id) {
        id -> Text,
        builder_id -> Text,
        title -> Text,
        description -> Text,
        property_type -> Text,
        listing_type -> Text,
        price -> Bigint,
        address -> Text,
        city -> Text,
        state -> Text,
        bedrooms -> Smallint,
        bathrooms -> Smallint,
        square_feet -> Bigint,
        amenities -> Text,
        images -> Text,
        highlights -> Text,
        specifications -> Text,
        nearby_locations -> Text,
        approval_status -> Text,
        rejection_reason -> Nullable<Text>,
        is_active -> Bool,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    favorites (id) {
        id -> Text,
        user_id -> Text,
        property_id -> Text,
        created_at -> Datetime,
    }
}

diesel::table! {
    leads (id) {
        id -> Text,
        property_id -> Nullable<Text>,
        name -> Text,
        email -> Text,
        phone -> Text,
        message -> Text,
        status -> Text,
        assigned_to -> Nullable<Text>,
        created_at -> Datetime,
        updated_at -> Datetime,
    }
}

diesel::table! {
    transactions (id) {
        id -> Text,
        user_id -> Text,
        property_id -> Nullable<Text>,
        amount -> Bigint,
        entry_kind -> Text,
        description -> Text,
        created_at -> Datetime,
    }
}

diesel::joinable!(properties -> users (builder_id));
diesel::joinable!(favorites -> properties (property_id));
diesel::joinable!(favorites -> users (user_id));
diesel::joinable!(transactions -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    pending_users,
    properties,
    favorites,
    leads,
    transactions,
);
