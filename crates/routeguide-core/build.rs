/// Builds the gRPC client and server code for the `route_guide.proto`
/// definition using `tonic-prost-build`.
///
/// The Protocol Buffer definitions in the `proto` directory are compiled into
/// Rust modules with gRPC bindings in the crate's `OUT_DIR`, alongside an
/// encoded file descriptor set used by the server's reflection service.
///
/// # Files and Paths
///
/// - Proto file: `proto/route_guide.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/routeguide_descriptor.bin`
///
/// # Panics
///
/// This function will `panic!` if code generation fails, which requires a
/// `protoc` binary on the `PATH` (or `PROTOC` set).
///
/// # Output
///
/// Generated code is exposed in Rust via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("routeguide");
/// }
/// ```
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("routeguide_descriptor.bin");

    println!("cargo:rerun-if-changed=proto/route_guide.proto");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/route_guide.proto"], &["proto"])
        .unwrap();
}
