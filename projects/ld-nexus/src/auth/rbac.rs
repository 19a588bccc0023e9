#[derive(Debug, Clone, PartialEq)]
pub enum Permission {
    EditOwnProfile,
    BrowseMarketplace,
    PostJobs,
    ViewJobMatches,
    ViewRecommendedJobs,
    PostForum,
    PublishResources,
    ModerateContent,
    ManageUsers,
}

pub fn has_permission(role: &str, permission: &Permission) -> bool {
    match role {
        "admin" => true,
        "company" => matches!(
            permission,
            Permission::EditOwnProfile
                | Permission::BrowseMarketplace
                | Permission::PostJobs
                | Permission::ViewJobMatches
                | Permission::PostForum
        ),
        "professional" => matches!(
            permission,
            Permission::EditOwnProfile
                | Permission::BrowseMarketplace
                | Permission::ViewRecommendedJobs
                | Permission::PostForum
                | Permission::PublishResources
        ),
        _ => false,
    }
}
