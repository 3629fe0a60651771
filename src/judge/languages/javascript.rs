use crate::judge::registry::{LanguageProfile, SANDBOX_CODE_DIR};
use crate::judge::wrapper::WrapperKind;

const SCRIPT: &str = "script.js";

/// Node.js 20. No in-process memory limit; the container cap applies.
pub fn profile() -> LanguageProfile {
    LanguageProfile {
        id: "js".to_string(),
        name: "JavaScript (Node.js 20)".to_string(),
        image_ref: "node:20-slim".to_string(),
        script_filename: SCRIPT.to_string(),
        run_command: vec![
            "node".to_string(),
            format!("{}/{}", SANDBOX_CODE_DIR, SCRIPT),
        ],
        wrapper: WrapperKind::JavaScriptExceptionOnly,
    }
}
