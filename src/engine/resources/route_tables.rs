use crate::engine::armtype::{ArmResource, ResourceBody};

pub fn create_route_table() -> ArmResource<ResourceBody> {
    ArmResource::new(
        "[variables('apiVersionNetwork')]",
        ResourceBody::new("[variables('routeTableName')]", "Microsoft.Network/routeTables"),
    )
}
