pub mod ela;
