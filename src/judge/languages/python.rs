use crate::judge::registry::{LanguageProfile, SANDBOX_CODE_DIR};
use crate::judge::wrapper::WrapperKind;

const SCRIPT: &str = "script.py";

/// Python 3.11 on the slim Debian image.
///
/// Python can cap its own address space, so the wrapper installs an
/// `RLIMIT_AS` ceiling before the snippet runs.
pub fn profile() -> LanguageProfile {
    LanguageProfile {
        id: "python".to_string(),
        name: "Python 3.11".to_string(),
        image_ref: "python:3.11-slim".to_string(),
        script_filename: SCRIPT.to_string(),
        run_command: vec![
            "python3".to_string(),
            format!("{}/{}", SANDBOX_CODE_DIR, SCRIPT),
        ],
        wrapper: WrapperKind::PythonAddressSpaceLimit,
    }
}
