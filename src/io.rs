use std::fs;
use std::path::Path;

/// Read a whole file, describing the failure with the offending path.
pub fn load_binary(path: impl AsRef<Path>) -> Result<Vec<u8>, String> {
    let path = path.as_ref();
    fs::read(path).map_err(|err| format!("Failed to read {:?}: {}", path, err))
}

pub fn load_string(path: impl AsRef<Path>) -> Result<String, String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|err| format!("Failed to open file {:?}: {}", path, err))
}

/// Directory an asset's relative references are resolved against.
pub fn asset_directory(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_name_the_path() {
        let err = load_string("definitely/not/here.wgsl").unwrap_err();
        assert!(err.contains("not/here.wgsl"), "{err}");
    }

    #[test]
    fn asset_directory_strips_file_name() {
        assert_eq!(
            asset_directory(Path::new("assets/sponza/Sponza.gltf")),
            Path::new("assets/sponza")
        );
        assert_eq!(asset_directory(Path::new("cube.obj")), Path::new(""));
    }
}
