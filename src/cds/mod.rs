pub mod lflist;
