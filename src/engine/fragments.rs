//! JSON text fragments for the legacy deployment templates.
//!
//! These render pieces of resource bodies as pre-indented JSON text and are
//! exposed to templates as `GetLBRules`, `GetProbes`, `GetSecurityRules`,
//! `GetDataDisks`, `GetKubernetesSubnets` and `GetPodStartIndex` by the
//! deployment accessor scope.

use crate::api::{AgentPoolProfile, ClusterSpec, StorageProfile};

const BASE_LB_PRIORITY: usize = 200;

fn join_fragments<T>(items: &[T], render: impl Fn(usize, &T) -> String) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| render(i, item))
        .collect::<Vec<_>>()
        .join(",\n")
}

pub fn get_lb_rule(name: &str, port: u16) -> String {
    format!(
        r#"	          {{
            "name": "LBRule{port}",
            "properties": {{
              "backendAddressPool": {{
                "id": "[concat(variables('{name}LbID'), '/backendAddressPools/', variables('{name}LbBackendPoolName'))]"
              }},
              "backendPort": {port},
              "enableFloatingIP": false,
              "frontendIPConfiguration": {{
                "id": "[variables('{name}LbIPConfigID')]"
              }},
              "frontendPort": {port},
              "idleTimeoutInMinutes": 5,
              "loadDistribution": "Default",
              "probe": {{
                "id": "[concat(variables('{name}LbID'),'/probes/tcp{port}Probe')]"
              }},
              "protocol": "Tcp"
            }}
          }}"#
    )
}

/// Load balancing rules for `ports`, comma separated. No ports, no text.
pub fn get_lb_rules(name: &str, ports: &[u16]) -> String {
    join_fragments(ports, |_, port| get_lb_rule(name, *port))
}

pub fn get_probe(port: u16) -> String {
    format!(
        r#"          {{
            "name": "tcp{port}Probe",
            "properties": {{
              "intervalInSeconds": 5,
              "numberOfProbes": 2,
              "port": {port},
              "protocol": "Tcp"
            }}
          }}"#
    )
}

pub fn get_probes(ports: &[u16]) -> String {
    join_fragments(ports, |_, port| get_probe(*port))
}

/// Inbound allow rule for one public port; priorities count up from 200.
pub fn get_security_rule(port: u16, port_index: usize) -> String {
    let priority = BASE_LB_PRIORITY + port_index;
    format!(
        r#"          {{
            "name": "Allow_{port}",
            "properties": {{
              "access": "Allow",
              "description": "Allow traffic from the Internet to port {port}",
              "destinationAddressPrefix": "*",
              "destinationPortRange": "{port}",
              "direction": "Inbound",
              "priority": {priority},
              "protocol": "*",
              "sourceAddressPrefix": "Internet",
              "sourcePortRange": "*"
            }}
          }}"#
    )
}

pub fn get_security_rules(ports: &[u16]) -> String {
    join_fragments(ports, |i, port| get_security_rule(*port, i))
}

fn storage_account_data_disk(pool: &str, size: u32, lun: usize) -> String {
    format!(
        r#"            {{
              "createOption": "Empty",
              "diskSizeGB": "{size}",
              "lun": {lun},
              "caching": "ReadOnly",
              "name": "[concat(variables('{pool}VMNamePrefix'), copyIndex(),'-datadisk{lun}')]",
              "vhd": {{
                "uri": "[concat('http://',variables('storageAccountPrefixes')[mod(add(add(div(copyIndex(),variables('maxVMsPerStorageAccount')),variables('{pool}StorageAccountOffset')),variables('dataStorageAccountPrefixSeed')),variables('storageAccountPrefixesCount'))],variables('storageAccountPrefixes')[div(add(add(div(copyIndex(),variables('maxVMsPerStorageAccount')),variables('{pool}StorageAccountOffset')),variables('dataStorageAccountPrefixSeed')),variables('storageAccountPrefixesCount'))],variables('{pool}DataAccountName'),'.blob.core.windows.net/vhds/',variables('{pool}VMNamePrefix'),copyIndex(), '--datadisk{lun}.vhd')]"
              }}
            }}"#
    )
}

fn managed_data_disk(size: u32, lun: usize) -> String {
    format!(
        r#"            {{
              "diskSizeGB": "{size}",
              "lun": {lun},
              "caching": "ReadOnly",
              "createOption": "Empty"
            }}"#
    )
}

/// `"dataDisks": [...]` block for a pool, or empty when it has no disks.
pub fn get_data_disks(profile: &AgentPoolProfile) -> String {
    if !profile.has_disks() {
        return String::new();
    }
    let disks = join_fragments(&profile.disk_sizes_gb, |lun, size| match profile.storage_profile {
        StorageProfile::StorageAccount => storage_account_data_disk(&profile.name, *size, lun),
        _ => managed_data_disk(*size, lun),
    });
    format!("\"dataDisks\": [\n{}\n          ],", disks)
}

/// First pod CIDR index handed to Windows nodes: one past every Linux node.
pub fn kubernetes_pod_start_index(spec: &ClusterSpec) -> u32 {
    let masters = spec.master_profile.as_ref().map(|m| m.count).unwrap_or_default();
    let linux_agents: u32 = spec
        .agent_pool_profiles
        .iter()
        .filter(|p| !p.is_windows())
        .map(|p| p.count)
        .sum();
    masters + linux_agents + 1
}

/// One `podCIDR` subnet per Windows node, each preceded by a separator so the
/// result appends to an existing subnet list.
pub fn get_kubernetes_subnets(spec: &ClusterSpec) -> String {
    let mut out = String::new();
    let mut index = kubernetes_pod_start_index(spec);
    for profile in spec.agent_pool_profiles.iter().filter(|p| p.is_windows()) {
        for _ in 0..profile.count {
            out.push_str(",\n");
            out.push_str(&format!(
                r#"{{
            "name": "podCIDR{index}",
            "properties": {{
              "addressPrefix": "10.244.{index}.0/24",
              "networkSecurityGroup": {{
                "id": "[variables('nsgID')]"
              }},
              "routeTable": {{
                "id": "[variables('routeTableID')]"
              }}
            }}
          }}"#
            ));
            index += 1;
        }
    }
    out
}

/// Escapes text for embedding in a single-line JSON string literal.
pub fn escape_single_line(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
