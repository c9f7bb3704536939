pub mod digest_scheduler;
