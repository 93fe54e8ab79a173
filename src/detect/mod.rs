// Container sniffing for upload candidates.

pub mod container;
