use crate::api::{AgentPoolProfile, ClusterSpec};
use crate::engine::armtype::{ArmResource, AvailabilitySet, AvailabilitySetProperties, Sku};

const AVAILABILITY_SET_TYPE: &str = "Microsoft.Compute/availabilitySets";

/// Master availability set.
///
/// Managed-disk masters without zones get an aligned set with 2 fault and 3
/// update domains. Storage-account masters get an empty properties block.
/// Anything else has no properties at all.
pub fn create_availability_set(
    spec: &ClusterSpec,
    is_managed_disks: bool,
) -> ArmResource<AvailabilitySet> {
    let mut av_set = AvailabilitySet {
        name: "[variables('masterAvailabilitySet')]".to_string(),
        location: "[variables('location')]".to_string(),
        resource_type: AVAILABILITY_SET_TYPE.to_string(),
        sku: None,
        properties: None,
    };

    let master = spec.master_profile.as_ref();
    let has_zones = master.is_some_and(|m| m.has_availability_zones());
    if !has_zones {
        if is_managed_disks {
            av_set.properties = Some(AvailabilitySetProperties {
                platform_fault_domain_count: Some(2),
                platform_update_domain_count: Some(3),
            });
            av_set.sku = Some(Sku::named("Aligned"));
        } else if master.is_some_and(|m| m.is_storage_account()) {
            av_set.properties = Some(AvailabilitySetProperties::default());
        }
    }

    ArmResource::new("[variables('apiVersionCompute')]", av_set)
}

pub fn create_agent_availability_set(profile: &AgentPoolProfile) -> ArmResource<AvailabilitySet> {
    let mut properties = AvailabilitySetProperties::default();
    let mut sku = None;
    if profile.is_managed_disks() {
        properties.platform_fault_domain_count = Some(2);
        properties.platform_update_domain_count = Some(3);
        sku = Some(Sku::named("Aligned"));
    }

    ArmResource::new(
        "[variables('apiVersionCompute')]",
        AvailabilitySet {
            name: format!("[variables('{}AvailabilitySet')]", profile.name),
            location: "[variables('location')]".to_string(),
            resource_type: AVAILABILITY_SET_TYPE.to_string(),
            sku,
            properties: Some(properties),
        },
    )
}
