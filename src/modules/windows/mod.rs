//! Windows-specific modules.
//!
//! - **win_iis_website**: Create, remove and configure IIS web sites
//!
//! ## Platform Detection
//!
//! Nothing here runs on the Windows target itself. Modules validate their
//! parameters on the control node and hand them to a site executor, which
//! is responsible for reaching the target (WinRM, PowerShell remoting, ...).
//!
//! ## Example Usage
//!
//! ```yaml
//! - name: Acme IIS site
//!   win_iis_website:
//!     name: Acme
//!     state: started
//!     port: 80
//!     physical_path: C:\sites\acme
//!     parameters: logfile.directory:C:\sites\logs|logfile.period:Daily
//! ```

pub mod site_executor;
pub mod site_info;
pub mod site_parameters;
pub mod win_iis_website;

pub use site_executor::{
    ApplyOutcome, ApplyRequest, ExecutionFailure, ExecutionFailureKind, ScriptExecutor,
    SiteExecutor,
};
pub use site_info::{Binding, SiteInfo, SiteRunState};
pub use site_parameters::{KnownParameter, ParametersSyntaxError, SiteParameters};
pub use win_iis_website::{SiteState, WebsiteParams, WebsiteValidator, WinIisWebsiteModule};

/// Rejects values that would break a single-line command or script argument.
pub fn check_single_line(value: &str) -> Result<(), String> {
    if value.contains('\0') {
        return Err("contains invalid null byte".to_string());
    }
    if value.contains('\n') || value.contains('\r') {
        return Err("contains invalid newline characters".to_string());
    }
    Ok(())
}

/// Validates a Windows path for basic structure.
pub fn check_windows_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("path cannot be empty".to_string());
    }
    check_single_line(path)?;

    // extended-length (\\?\) and device (\\.\) namespaces
    let unprefixed = path
        .strip_prefix(r"\\?\")
        .or_else(|| path.strip_prefix(r"\\.\"))
        .unwrap_or(path);

    // ':' is only legal as the drive separator
    let body = match unprefixed.as_bytes() {
        [drive, b':', ..] if drive.is_ascii_alphabetic() => &unprefixed[2..],
        _ => unprefixed,
    };
    if let Some(c) = body.chars().find(|c| matches!(c, '<' | '>' | '"' | '|' | '?' | '*' | ':')) {
        return Err(format!("path contains invalid character '{}'", c));
    }

    Ok(())
}
