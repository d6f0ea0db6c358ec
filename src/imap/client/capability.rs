use enumflags2::{BitFlags, bitflags};
use log::trace;

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Capability {
    Imap4rev1,
    SpecialUse,
    CreateSpecialUse,
    StartTls,
    LoginDisabled,
    Unselect,
    UidPlus,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    capabilities: BitFlags<Capability>,
    known: bool,
}

impl Capabilities {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut capabilities = Self::default();
        capabilities.update(names);
        capabilities
    }

    /// Replaces the current set with the names the server just announced.
    pub fn update<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        self.capabilities = BitFlags::empty();
        self.known = true;
        for name in names {
            match name.to_ascii_uppercase().as_str() {
                "IMAP4REV1" => self.capabilities.insert(Capability::Imap4rev1),
                "SPECIAL-USE" => self.capabilities.insert(Capability::SpecialUse),
                "CREATE-SPECIAL-USE" => self.capabilities.insert(Capability::CreateSpecialUse),
                "STARTTLS" => self.capabilities.insert(Capability::StartTls),
                "LOGINDISABLED" => self.capabilities.insert(Capability::LoginDisabled),
                "UNSELECT" => self.capabilities.insert(Capability::Unselect),
                "UIDPLUS" => self.capabilities.insert(Capability::UidPlus),
                _ => trace!("unhandled capability {name}"),
            }
        }
        trace!("updated capabilities to {:?}", self.capabilities);
    }

    pub fn contains(&self, other: Capability) -> bool {
        self.capabilities.contains(other)
    }

    /// Whether the server told us anything yet.
    pub fn is_known(&self) -> bool {
        self.known
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_known_capabilities_are_recognised() {
        let capabilities =
            Capabilities::from_names(["IMAP4rev1", "special-use", "CREATE-SPECIAL-USE", "IDLE"]);
        assert!(capabilities.is_known());
        assert!(capabilities.contains(Capability::Imap4rev1));
        assert!(capabilities.contains(Capability::SpecialUse));
        assert!(capabilities.contains(Capability::CreateSpecialUse));
        assert!(!capabilities.contains(Capability::StartTls));
    }

    #[rstest]
    fn test_update_replaces_previous_set() {
        let mut capabilities = Capabilities::from_names(["STARTTLS", "LOGINDISABLED"]);
        capabilities.update(["IMAP4rev1"]);
        assert!(!capabilities.contains(Capability::StartTls));
        assert!(capabilities.contains(Capability::Imap4rev1));
    }

    #[rstest]
    fn test_default_is_unknown() {
        assert!(!Capabilities::default().is_known());
    }
}
