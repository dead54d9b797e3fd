//! Hand-written `extern "C"` surface for the native Reed-Solomon codec built
//! by `build.rs` from `src/rs.c`. No bindgen step: the C surface is small and
//! stable enough to keep in sync by hand.

use std::os::raw::{c_int, c_uchar};

#[repr(C)]
pub struct reed_solomon {
	pub data_shards: c_int,
	pub parity_shards: c_int,
	pub m: *mut c_uchar,
	pub parity: *mut c_uchar,
}

extern "C" {
	pub fn reed_solomon_init();
	pub fn reed_solomon_new(data_shards: c_int, parity_shards: c_int) -> *mut reed_solomon;
	pub fn reed_solomon_release(rs: *mut reed_solomon);
	pub fn reed_solomon_encode(rs: *mut reed_solomon, shards: *mut *mut c_uchar, nr_shards: c_int, size: c_int);
	pub fn reed_solomon_reconstruct(rs: *mut reed_solomon, shards: *mut *mut c_uchar, marks: *mut c_uchar, nr_shards: c_int, size: c_int) -> c_int;
}
