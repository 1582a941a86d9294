//! Active Directory object classification constants.

/// `sAMAccountType` of a normal user account.
pub const NORMAL_ACCOUNT: u32 = 805_306_368;

/// `sAMAccountType` of a global security group.
pub const SECURITY_GLOBAL_GROUP: u32 = 268_435_456;

/// `sAMAccountType` of a distribution group.
pub const DISTRIBUTION_GROUP: u32 = 268_435_457;

/// RDN attribute naming an organizational unit.
pub const FOLDER_RDN: &str = "OU";

/// RDN attribute naming a container or common name.
pub const CONTAINER_RDN: &str = "CN";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_types_match_directory_values() {
        assert_eq!(NORMAL_ACCOUNT, 0x3000_0000);
        assert_eq!(SECURITY_GLOBAL_GROUP, 0x1000_0000);
        assert_eq!(DISTRIBUTION_GROUP, SECURITY_GLOBAL_GROUP + 1);
    }

    #[test]
    fn rdn_attributes() {
        assert_eq!(format!("{FOLDER_RDN}=Staff"), "OU=Staff");
        assert_eq!(format!("{CONTAINER_RDN}=Users"), "CN=Users");
    }
}
