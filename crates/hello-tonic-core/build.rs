/// Builds the gRPC client and server code for `hello/v1/hello.proto` using
/// `tonic-prost-build`.
///
/// The generated messages additionally derive `serde` traits so the HTTP
/// gateway can relay RPC responses as JSON without a second message model. The
/// field naming follows the protobuf JSON mapping (`lowerCamelCase`).
///
/// # Files and Paths
///
/// - Proto file: `proto/hello/v1/hello.proto`
/// - Includes: `proto/` (plus the well-known types shipped with `protoc`)
/// - Descriptor set: `$OUT_DIR/hello_descriptor.bin`, consumed by the
///   reflection service.
///
/// # Panics
///
/// Panics if code generation fails, which aborts the build with the `protoc`
/// diagnostics.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("hello_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    config
        .type_attribute(
            ".hello.v1.HelloResponse",
            "#[derive(serde::Serialize, serde::Deserialize)]",
        )
        .type_attribute(".hello.v1.HelloResponse", "#[serde(rename_all = \"camelCase\")]")
        .file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/hello/v1/hello.proto");

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/hello/v1/hello.proto"], &["proto"])
        .unwrap();
}
