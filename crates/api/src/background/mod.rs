pub mod lock_reaper;
