//! `--register`: install a command named after a workspace.
//!
//! The wrapper is a two-line shell script in the bin directory that runs
//! muxwright on the workspace file, so `demo status` works like
//! `muxwright /path/to/demo.yml status`.

use crate::error::{ConfigError, MuxwrightError, Result};
use crate::parser::{ParseMode, Parser};
use crate::shell;
use std::path::{Path, PathBuf};

const MARKER: &str = "# muxwright wrapper";

/// Contents of the wrapper for `workspace`.
pub fn wrapper_script(exe: &Path, workspace: &Path) -> String {
    format!(
        "#!/bin/sh\n{}\nexec {} {} \"$@\"\n",
        MARKER,
        shell::quote(&exe.to_string_lossy()),
        shell::quote(&workspace.to_string_lossy())
    )
}

/// Install a wrapper for the workspace in `file` into `bin_dir`.
///
/// Only the `name` of the workspace is read; the file is fully validated
/// each time the wrapper runs. An existing wrapper is replaced, any other
/// file is left alone.
pub fn register(file: &Path, bin_dir: &Path, exe: &Path) -> Result<PathBuf> {
    let file = std::fs::canonicalize(file).map_err(|source| crate::error::ParseError::Io {
        path: file.to_path_buf(),
        source,
    })?;
    let parsed = Parser::new(ParseMode::Lenient).parse_file(&file)?;
    let name = parsed
        .document
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or(ConfigError::MissingName)?;
    if name.contains('/') || name.starts_with('.') {
        return Err(MuxwrightError::InvalidWrapperName(name));
    }

    let target = bin_dir.join(&name);
    if target.exists() {
        let existing = std::fs::read_to_string(&target).unwrap_or_default();
        if !existing.contains(MARKER) {
            return Err(MuxwrightError::WrapperExists(target));
        }
    }

    std::fs::create_dir_all(bin_dir)?;
    std::fs::write(&target, wrapper_script(exe, &file))?;
    make_executable(&target)?;
    log::info!("registered {} -> {}", target.display(), file.display());
    Ok(target)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_script() {
        let script = wrapper_script(
            Path::new("/usr/bin/muxwright"),
            Path::new("/home/me/my ws.yml"),
        );
        assert_eq!(
            script,
            "#!/bin/sh\n# muxwright wrapper\nexec /usr/bin/muxwright '/home/me/my ws.yml' \"$@\"\n"
        );
    }

    #[test]
    fn test_register_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("demo.yml");
        std::fs::write(&file, "name: demo\nwindows:\n  - name: main\n").unwrap();
        let bin = dir.path().join("bin");

        let wrapper = register(&file, &bin, Path::new("/usr/bin/muxwright")).unwrap();
        assert_eq!(wrapper, bin.join("demo"));
        let script = std::fs::read_to_string(&wrapper).unwrap();
        assert!(script.contains(&*std::fs::canonicalize(&file).unwrap().to_string_lossy()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&wrapper).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }

        assert!(register(&file, &bin, Path::new("/usr/bin/muxwright")).is_ok());
    }

    #[test]
    fn test_foreign_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("demo.yml");
        std::fs::write(&file, "name: demo\n").unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        std::fs::write(bin.join("demo"), "#!/bin/sh\necho mine\n").unwrap();

        assert!(matches!(
            register(&file, &bin, Path::new("/usr/bin/muxwright")),
            Err(MuxwrightError::WrapperExists(_))
        ));
        assert_eq!(std::fs::read_to_string(bin.join("demo")).unwrap(), "#!/bin/sh\necho mine\n");
    }

    #[test]
    fn test_requires_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("anon.yml");
        std::fs::write(&file, "windows:\n  - name: main\n").unwrap();
        assert!(matches!(
            register(&file, dir.path(), Path::new("/usr/bin/muxwright")),
            Err(MuxwrightError::Config(ConfigError::MissingName))
        ));
    }
}
