//! Infrastructure inventory declarations.
//!
//! Every function returns a [`CollectionBuilder`] named after the function,
//! so callers can adjust a declaration before building it.

use invsync_core::{ModelClass, RelationshipKind};

use super::CollectionBuilder;
use crate::reconnect::OrphanReconnector;
use crate::relationship::{RelationshipSaver, RootRelationshipSaver};

fn collection(name: &str, model: &str) -> CollectionBuilder {
    CollectionBuilder::new(name).model_class(ModelClass::new(model))
}

pub fn networks() -> CollectionBuilder {
    collection("networks", "Network")
        .manager_ref(&["hardware", "ipaddress", "ipv6address"])
        .parent_collections(&["vms", "miq_templates"])
}

pub fn host_networks() -> CollectionBuilder {
    collection("host_networks", "Network")
        .manager_ref(&["hardware", "ipaddress"])
        .parent_collections(&["hosts"])
}

pub fn guest_devices() -> CollectionBuilder {
    collection("guest_devices", "GuestDevice")
        .manager_ref(&["hardware", "uid_ems"])
        .parent_collections(&["vms", "miq_templates"])
}

pub fn host_guest_devices() -> CollectionBuilder {
    collection("host_guest_devices", "GuestDevice")
        .manager_ref(&["hardware", "uid_ems"])
        .parent_collections(&["hosts"])
}

pub fn host_hardwares() -> CollectionBuilder {
    collection("host_hardwares", "Hardware")
        .manager_ref(&["host"])
        .parent_collections(&["hosts"])
}

pub fn host_system_services() -> CollectionBuilder {
    collection("host_system_services", "SystemService")
        .manager_ref(&["host", "name"])
        .parent_collections(&["hosts"])
}

pub fn snapshots() -> CollectionBuilder {
    collection("snapshots", "Snapshot")
        .manager_ref(&["vm_or_template", "uid"])
        .parent_collections(&["vms", "miq_templates"])
}

pub fn host_operating_systems() -> CollectionBuilder {
    collection("host_operating_systems", "OperatingSystem")
        .manager_ref(&["host"])
        .parent_collections(&["hosts"])
}

pub fn ems_custom_attributes() -> CollectionBuilder {
    collection("ems_custom_attributes", "CustomAttribute")
        .manager_ref(&["name"])
        .parent_collections(&["vms", "miq_templates"])
}

pub fn vm_and_template_ems_custom_fields() -> CollectionBuilder {
    collection("vm_and_template_ems_custom_fields", "CustomAttribute")
        .manager_ref(&["name"])
        .parent_collections(&["vms"])
        .inventory_attributes(&["section", "name", "value", "source", "resource"])
}

pub fn ems_folders() -> CollectionBuilder {
    collection("ems_folders", "EmsFolder")
        .manager_ref(&["uid_ems"])
        .attributes_blacklist(&["ems_children"])
}

/// Datacenters share the folder table.
pub fn datacenters() -> CollectionBuilder {
    CollectionBuilder::new("datacenters")
        .model_class(ModelClass::with_base("Datacenter", "EmsFolder"))
}

pub fn resource_pools() -> CollectionBuilder {
    collection("resource_pools", "ResourcePool")
        .manager_ref(&["uid_ems"])
        .attributes_blacklist(&["ems_children"])
}

pub fn ems_clusters() -> CollectionBuilder {
    collection("ems_clusters", "EmsCluster")
        .attributes_blacklist(&["ems_children", "datacenter_id"])
}

/// Storages are shared between managed systems and may be reported
/// partially, so unseen ones are kept.
pub fn storages() -> CollectionBuilder {
    collection("storages", "Storage")
        .manager_ref(&["location"])
        .complete(false)
        .global(true)
}

pub fn hosts() -> CollectionBuilder {
    collection("hosts", "Host").custom_reconnect(OrphanReconnector::new())
}

pub fn vms() -> CollectionBuilder {
    CollectionBuilder::new("vms")
        .model_class(ModelClass::with_base("Vm", "VmOrTemplate"))
        .custom_reconnect(OrphanReconnector::new())
}

/// Templates share the VM table under their own subtype.
pub fn miq_templates() -> CollectionBuilder {
    CollectionBuilder::new("miq_templates")
        .model_class(ModelClass::with_base("MiqTemplate", "VmOrTemplate"))
}

pub fn host_storages() -> CollectionBuilder {
    collection("host_storages", "HostStorage")
        .manager_ref(&["host", "storage"])
        .parent_collections(&["hosts"])
}

pub fn host_switches() -> CollectionBuilder {
    collection("host_switches", "HostSwitch")
        .manager_ref(&["host", "switch"])
        .parent_collections(&["hosts"])
}

pub fn host_virtual_switches() -> CollectionBuilder {
    collection("host_virtual_switches", "Switch")
        .manager_ref(&["host", "uid_ems"])
        .parent_collections(&["hosts"])
}

pub fn distributed_virtual_switches() -> CollectionBuilder {
    CollectionBuilder::new("distributed_virtual_switches")
        .model_class(ModelClass::with_base("DistributedVirtualSwitch", "Switch"))
        .manager_ref(&["uid_ems"])
}

pub fn lans() -> CollectionBuilder {
    collection("lans", "Lan")
        .manager_ref(&["switch", "uid_ems"])
        .parent_collections(&["hosts"])
}

pub fn subnets() -> CollectionBuilder {
    collection("subnets", "Subnet")
        .manager_ref(&["lan", "ems_ref"])
        .parent_collections(&["hosts"])
}

pub fn customization_specs() -> CollectionBuilder {
    collection("customization_specs", "CustomizationSpec").manager_ref(&["name"])
}

pub fn miq_scsi_luns() -> CollectionBuilder {
    collection("miq_scsi_luns", "MiqScsiLun")
        .manager_ref(&["miq_scsi_target", "uid_ems"])
        .parent_collections(&["hosts"])
}

pub fn miq_scsi_targets() -> CollectionBuilder {
    collection("miq_scsi_targets", "MiqScsiTarget")
        .manager_ref(&["guest_device", "uid_ems"])
        .parent_collections(&["hosts"])
}

pub fn storage_profiles() -> CollectionBuilder {
    collection("storage_profiles", "StorageProfile")
}

/// Attaches the one folder without a `parent` to the managed system.
pub fn root_folder_relationship() -> CollectionBuilder {
    CollectionBuilder::new("root_folder_relationship")
        .skip_model_class()
        .custom_save(RootRelationshipSaver::new("ems_folders"))
        .dependency_attributes("ems_folders", &["ems_folders"])
}

/// Parent/child edges of `kind` read from `relationship_key`, with parents
/// of `parent_type`. Add the child collections with
/// [`CollectionBuilder::dependency_attributes`].
pub fn relationship(
    name: &str,
    relationship_key: &str,
    kind: RelationshipKind,
    parent_type: &str,
) -> CollectionBuilder {
    CollectionBuilder::new(name)
        .skip_model_class()
        .custom_save(RelationshipSaver::new(
            relationship_key,
            kind,
            ModelClass::new(parent_type),
        ))
}
