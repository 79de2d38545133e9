//! Prints the CRD manifests as YAML.
//!
//! `cargo run -p crds --bin crdgen > config/crd/monitors.yaml`

use crds::Monitor;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&Monitor::crd())?);
    Ok(())
}
