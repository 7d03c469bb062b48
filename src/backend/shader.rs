// Shader module loading
//
// Vulkan uses SPIR-V bytecode for shaders. The triangle's two stages are
// compiled ahead of time (see build.rs) and read from disk at startup.

use ash::vk;
use std::fs::File;
use std::path::Path;

use crate::error::{Result, RuntimeContext};

/// Read a SPIR-V binary as 32-bit words.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = File::open(path)
        .context(&format!("Failed to open shader {}", path.display()))?;

    // read_spv checks the length and copies into aligned words
    ash::util::read_spv(&mut file)
        .context(&format!("Failed to read SPIR-V from {}", path.display()))
}

pub fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe { device.create_shader_module(&create_info, None) }
        .context("Failed to create shader module")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RendererError;
    use std::io::Write;

    fn temp_file(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "triangle-renderer-{}-{}",
            std::process::id(),
            name
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn missing_shader_is_a_runtime_error() {
        let result = load_spirv(Path::new("shaders/does-not-exist.spv"));

        match result {
            Err(RendererError::Runtime(message)) => {
                assert!(message.contains("does-not-exist.spv"));
            }
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn reads_little_endian_words() {
        // SPIR-V magic number followed by one more word
        let bytes = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];
        let path = temp_file("words.spv", &bytes);

        let words = load_spirv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(words, vec![0x0723_0203, 0x0001_0000]);
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let path = temp_file("truncated.spv", &[0x03, 0x02, 0x23]);

        let result = load_spirv(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(RendererError::Runtime(_))));
    }
}
