use std::{env, fs, io, path::Path};

use shaderc::{CompileOptions, Compiler, ShaderKind};

/// Compute kernels under `src/shaders`, compiled to `$OUT_DIR/spirv/<name>.comp.v`.
const KERNELS: &[&str] = &["copy", "mono", "luma"];

#[derive(Debug)]
enum BuildError {
    Io(io::Error),
    Shader(shaderc::Error),
    NoCompiler,
}

fn main() -> Result<(), BuildError> {
    let mut compiler = Compiler::new().ok_or(BuildError::NoCompiler)?;
    let mut options = CompileOptions::new().ok_or(BuildError::NoCompiler)?;
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let out_dir = env::var_os("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    let target_dir = Path::new(&out_dir).join("spirv");
    fs::create_dir_all(&target_dir)?;

    for name in KERNELS {
        let source_path = format!("src/shaders/{}.comp", name);
        println!("cargo:rerun-if-changed={}", source_path);

        let source = fs::read_to_string(&source_path)?;
        let binary = compiler.compile_into_spirv(
            &source,
            ShaderKind::Compute,
            &source_path,
            "main",
            Some(&options),
        )?;

        fs::write(target_dir.join(format!("{}.comp.v", name)), binary.as_binary_u8())?;
    }

    Ok(())
}

impl From<io::Error> for BuildError {
    fn from(err: io::Error) -> Self {
        BuildError::Io(err)
    }
}

impl From<shaderc::Error> for BuildError {
    fn from(err: shaderc::Error) -> Self {
        BuildError::Shader(err)
    }
}
