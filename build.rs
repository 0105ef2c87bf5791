fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protoc_path = protoc_bin_vendored::protoc_bin_path()?;
    std::env::set_var("PROTOC", protoc_path);

    let mut config = prost_build::Config::new();

    config.compile_protos(
        &["proto/gtfs-realtime-nyct.proto"], // input proto
        &["proto/"],                         // proto include path
    )?;
    Ok(())
}
