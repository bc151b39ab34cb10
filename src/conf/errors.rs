use std::net::AddrParseError;

use smr::ReplicaId;

quick_error! {
    #[derive(Debug)]
    pub enum ConfError {
        IOError(e: std::io::Error) {
            from(e: std::io::Error) -> (e)
            display("io error: {}", e)
        }

        BadYaml(e: serde_yaml::Error) {
            from(e: serde_yaml::Error) -> (e)
            display("bad yaml: {}", e)
        }

        BadAddr(e: AddrParseError) {
            from(e: AddrParseError) -> (e)
            display("bad listen address: {}", e)
        }

        BadWorkload(name: String) {
            display("unknown workload: {}", name)
        }

        NoReplica {
            display("n_replicas must be greater than 0")
        }

        BadReplicaId(rid: ReplicaId, n: usize) {
            display("replica_id {} out of range, n_replicas: {}", rid, n)
        }

        BadBatch {
            display("max_batch must be greater than 0")
        }
    }
}

impl PartialEq<ConfError> for ConfError {
    fn eq(&self, other: &ConfError) -> bool {
        match (self, other) {
            (Self::IOError(a), Self::IOError(b)) => a.kind() == b.kind(),
            (Self::BadYaml(_), Self::BadYaml(_)) => true,
            (Self::BadAddr(a), Self::BadAddr(b)) => a == b,
            (Self::BadWorkload(a), Self::BadWorkload(b)) => a == b,
            (Self::NoReplica, Self::NoReplica) => true,
            (Self::BadReplicaId(a, b), Self::BadReplicaId(x, y)) => a == x && b == y,
            (Self::BadBatch, Self::BadBatch) => true,
            _ => false,
        }
    }
}
