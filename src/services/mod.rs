pub mod arxiv_service;
pub mod auth_service;
pub mod digest_service;
pub mod feed_parser;
pub mod interest_sampler;
pub mod mail_service;
pub mod user_service;
