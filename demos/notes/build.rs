fn main() {
    println!("cargo:rerun-if-changed=schema.yaml");
    tessera_codegen::generate_from_schema(
        "schema.yaml",
        &format!("{}/generated.rs", std::env::var("OUT_DIR").unwrap()),
    )
    .expect("Code generation failed");
}
