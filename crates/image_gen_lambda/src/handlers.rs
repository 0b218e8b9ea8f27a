pub mod generate;
pub mod line_webhook;
