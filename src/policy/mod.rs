pub mod lirs;
