fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let streaming_intent_graph = tonic_build::manual::Method::builder()
        .name("streaming_intent_graph")
        .route_name("StreamingIntentGraph")
        .input_type("crate::pb::StreamingIntentGraphRequest")
        .output_type("crate::pb::StreamingIntentGraphResponse")
        .codec_path("tonic::codec::ProstCodec")
        .client_streaming()
        .server_streaming()
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("ChipperGrpc")
        .package("chipperpb")
        .method(streaming_intent_graph)
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
