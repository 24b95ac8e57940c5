pub mod auth_helpers;
pub mod form_helpers;
pub mod mail_helpers;
pub mod media_helpers;
pub mod moderation_helpers;
pub mod public_helpers;
pub mod sanitization_helpers;
