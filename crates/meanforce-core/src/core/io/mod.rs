//! Reading and writing the numeric text tables exchanged with the MD engine
//! and with downstream training.

pub mod table;
