fn main() {
	println!("cargo:rerun-if-changed=src/rs.c");
	println!("cargo:rerun-if-changed=src/rs.h");

	cc::Build::new().file("src/rs.c").compile("reed_solomon_native");
}
