//! Built-in method names and the depth each one is encoded at.

/// Depth used for registered zero-argument actions.
pub const ACTION_DEPTH: u32 = 0;

/// Prefix of the user directory sub-namespace.
pub const USER_DIRECTORY_PREFIX: &str = "userdirectory.";

/// Every built-in method. Client and server share this table so both sides
/// expand object graphs to the same depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    AddObject,
    UpdateObject,
    RemoveObject,
    RemoveObjectCascadedly,
    Find,
    FindComplement,
    FindDistinctValues,
    FindSumsOfValues,
    FindAverageValues,
    CountObjects,
    ContainsId,
    IsIdDeleted,
    RetrieveObject,
    GetInternalNameOfContainer,
    GetAssemblyQualifiedTypeNameOfContainer,
    Cleanup,
    Ping,
    FindUser,
    FindUsers,
}

impl Method {
    pub const ALL: [Method; 19] = [
        Method::AddObject,
        Method::UpdateObject,
        Method::RemoveObject,
        Method::RemoveObjectCascadedly,
        Method::Find,
        Method::FindComplement,
        Method::FindDistinctValues,
        Method::FindSumsOfValues,
        Method::FindAverageValues,
        Method::CountObjects,
        Method::ContainsId,
        Method::IsIdDeleted,
        Method::RetrieveObject,
        Method::GetInternalNameOfContainer,
        Method::GetAssemblyQualifiedTypeNameOfContainer,
        Method::Cleanup,
        Method::Ping,
        Method::FindUser,
        Method::FindUsers,
    ];

    /// Method name as sent on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Method::AddObject => "addobject",
            Method::UpdateObject => "updateobject",
            Method::RemoveObject => "removeobject",
            Method::RemoveObjectCascadedly => "removeobjectcascadedly",
            Method::Find => "find",
            Method::FindComplement => "findcomplement",
            Method::FindDistinctValues => "finddistinctvalues",
            Method::FindSumsOfValues => "findsumsofvalues",
            Method::FindAverageValues => "findaveragevalues",
            Method::CountObjects => "countobjects",
            Method::ContainsId => "containsid",
            Method::IsIdDeleted => "isiddeleted",
            Method::RetrieveObject => "retrieveobject",
            Method::GetInternalNameOfContainer => "getinternalnameofcontainer",
            Method::GetAssemblyQualifiedTypeNameOfContainer => {
                "getassemblyqualifiedtypenameofcontainer"
            }
            Method::Cleanup => "cleanup",
            Method::Ping => "ping",
            Method::FindUser => "userdirectory.finduser",
            Method::FindUsers => "userdirectory.findusers",
        }
    }

    /// The built-in method called `name`. Names are case sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// How many reference levels requests and responses of this method
    /// expand.
    pub fn depth(self) -> u32 {
        match self {
            Method::AddObject | Method::UpdateObject | Method::Find => 2,
            Method::FindComplement => 3,
            Method::RetrieveObject | Method::RemoveObject | Method::RemoveObjectCascadedly => 1,
            _ => 0,
        }
    }

    /// Write-style methods require a reachable endpoint and never degrade
    /// to defaults.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Method::AddObject
                | Method::UpdateObject
                | Method::RemoveObject
                | Method::RemoveObjectCascadedly
                | Method::Cleanup
        )
    }
}
