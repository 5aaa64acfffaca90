use thiserror::Error;

/// A required device capability is missing.
///
/// Each variant is remediable by the user and carries a message saying how.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("the camera requires a secure connection; open the app over https:// or localhost")]
    InsecureContext,

    #[error("this browser does not support camera access")]
    CaptureUnsupported,

    #[error("this browser cannot detect barcodes from the camera; use a hardware scanner instead")]
    DetectionUnsupported,
}

/// Environment queries, answered by the host platform.
pub trait CapabilitySource: Send + Sync {
    fn is_secure_context(&self) -> bool;

    fn has_capture_api(&self) -> bool;

    fn has_barcode_detector(&self) -> bool;
}

/// Result of probing the environment once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub secure_context: bool,
    pub capture_supported: bool,
    pub detection_supported: bool,
}

impl Capabilities {
    /// Query the source. Never fails.
    pub fn probe(source: &dyn CapabilitySource) -> Self {
        Self {
            secure_context: source.is_secure_context(),
            capture_supported: source.has_capture_api(),
            detection_supported: source.has_barcode_detector(),
        }
    }

    /// Everything available.
    pub fn full() -> Self {
        Self {
            secure_context: true,
            capture_supported: true,
            detection_supported: true,
        }
    }

    /// First missing capability, checked in the order the user has to fix them.
    pub fn check(&self) -> Result<(), EnvironmentError> {
        if !self.secure_context {
            return Err(EnvironmentError::InsecureContext);
        }
        if !self.capture_supported {
            return Err(EnvironmentError::CaptureUnsupported);
        }
        if !self.detection_supported {
            return Err(EnvironmentError::DetectionUnsupported);
        }
        Ok(())
    }

    /// Whether camera scanning can be offered at all.
    pub fn supported(&self) -> bool {
        self.check().is_ok()
    }
}

impl CapabilitySource for Capabilities {
    fn is_secure_context(&self) -> bool {
        self.secure_context
    }

    fn has_capture_api(&self) -> bool {
        self.capture_supported
    }

    fn has_barcode_detector(&self) -> bool {
        self.detection_supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_order() {
        let mut caps = Capabilities {
            secure_context: false,
            capture_supported: false,
            detection_supported: false,
        };
        assert_eq!(caps.check(), Err(EnvironmentError::InsecureContext));

        caps.secure_context = true;
        assert_eq!(caps.check(), Err(EnvironmentError::CaptureUnsupported));

        caps.capture_supported = true;
        assert_eq!(caps.check(), Err(EnvironmentError::DetectionUnsupported));

        caps.detection_supported = true;
        assert!(caps.supported());
    }

    #[test]
    fn test_messages_are_distinct() {
        let messages = [
            EnvironmentError::InsecureContext.to_string(),
            EnvironmentError::CaptureUnsupported.to_string(),
            EnvironmentError::DetectionUnsupported.to_string(),
        ];
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert!(messages[0].contains("https"));
    }
}
