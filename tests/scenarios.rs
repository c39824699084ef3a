mod common;

use armgen::api::{LoadBalancerSku, MasterProfile, PrivateCluster};
use armgen::engine::fragments::{get_lb_rules, get_probes, get_security_rules};
use armgen::engine::resources::availability_sets::create_availability_set;
use armgen::engine::resources::inbound_nat_rules::create_inbound_nat_rules;
use armgen::engine::resources::load_balancers::create_master_load_balancer;
use armgen::{ClusterSpec, GeneratorMode, generate_template};
use common::{InMemorySource, context, fixture_spec};
use serde_json::{Value, json};

fn master_only(count: u32) -> ClusterSpec {
    ClusterSpec {
        location: "westus2".to_string(),
        master_profile: Some(MasterProfile {
            count,
            dns_prefix: "scenario".to_string(),
            first_consecutive_static_ip: "10.240.255.5".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[test]
fn test_master_availability_set_without_storage_profile() {
    let avset = create_availability_set(&master_only(1), false);
    assert_eq!(
        avset.to_value().unwrap(),
        json!({
            "apiVersion": "[variables('apiVersionCompute')]",
            "name": "[variables('masterAvailabilitySet')]",
            "location": "[variables('location')]",
            "type": "Microsoft.Compute/availabilitySets",
        })
    );
}

#[test]
fn test_single_master_nat_rule() {
    let rules = create_inbound_nat_rules(1);
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].properties.backend_port, 22);
    assert_eq!(rules[0].properties.frontend_port, json!(22));
}

#[test]
fn test_empty_fragment_lists() {
    assert_eq!(get_lb_rules("", &[]), "");
    assert_eq!(get_probes(&[]), "");
    assert_eq!(get_security_rules(&[]), "");
}

#[test]
fn test_private_standard_master_lb_has_only_outbound_rules() {
    let mut spec = master_only(1);
    let k8s = &mut spec.orchestrator_profile.kubernetes_config;
    k8s.load_balancer_sku = LoadBalancerSku::Standard;
    k8s.private_cluster = Some(PrivateCluster {
        enabled: true,
        jumpbox_profile: None,
    });

    let lb = create_master_load_balancer(&spec, false).to_value().unwrap();
    let properties = &lb["properties"];
    assert!(properties["outboundRules"].is_array());
    assert!(properties.get("loadBalancingRules").is_none());
    assert!(properties.get("inboundNatRules").is_none());
    assert!(properties.get("inboundNatPools").is_none());
}

#[test]
fn test_generated_master_lb_for_basic_availability_set() {
    let source = InMemorySource::default();
    let out = generate_template(&fixture_spec(), &context(&source), GeneratorMode::Structured).unwrap();
    let template: Value = serde_json::from_str(&out.template).unwrap();
    let lb = template["resources"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "[variables('masterLbName')]")
        .unwrap();

    let properties = &lb["properties"];
    assert!(properties["loadBalancingRules"].is_array());
    assert!(properties.get("inboundNatPools").is_none());
    let ports: Vec<&Value> = properties["inboundNatRules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| &r["properties"]["frontendPort"])
        .collect();
    assert_eq!(ports, vec![&json!(22), &json!(2201), &json!(2202)]);
}

#[test]
fn test_variables_size_master_lists_to_count() {
    let source = InMemorySource::default();
    let out = generate_template(&fixture_spec(), &context(&source), GeneratorMode::Structured).unwrap();
    let template: Value = serde_json::from_str(&out.template).unwrap();
    let variables = &template["variables"];
    assert_eq!(
        variables["masterPrivateIpAddrs"],
        json!(["10.240.255.5", "10.240.255.6", "10.240.255.7"])
    );
    assert_eq!(variables["masterCount"], json!(3));
}
