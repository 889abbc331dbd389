use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=GUROBI_HOME");
    println!("cargo:rerun-if-env-changed=GUROBI_LIB");

    if env::var_os("CARGO_FEATURE_GUROBI").is_none() {
        return;
    }

    if let Some(home) = env::var_os("GUROBI_HOME") {
        let lib_dir = PathBuf::from(home).join("lib");
        println!("cargo:rustc-link-search=native={}", lib_dir.display());
    }
    let lib = env::var("GUROBI_LIB").unwrap_or_else(|_| "gurobi120".to_string());
    println!("cargo:rustc-link-lib=dylib={}", lib);
}
