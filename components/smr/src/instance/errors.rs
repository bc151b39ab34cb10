use crate::instance::{InstanceId, InstanceStatus, ReplicaId};

quick_error! {
    /// SpaceError is a violation of the instance space contract.
    #[derive(Debug, Eq, PartialEq)]
    pub enum SpaceError {
        ReplicaNotFound(rid: ReplicaId) {
            display("replica {} not found in instance space", rid)
        }

        InvalidId(iid: InstanceId) {
            display("invalid instance id: {}", iid)
        }

        NotFound(iid: InstanceId) {
            display("instance {} not found", iid)
        }

        Existed(iid: InstanceId) {
            display("instance {} already exists", iid)
        }

        EmptyBatch(iid: InstanceId) {
            display("instance {} has no command", iid)
        }

        BadDeps(iid: InstanceId, want: usize, actual: usize) {
            display("instance {} deps length, need:{}, but:{}", iid, want, actual)
        }

        BadStatus(iid: InstanceId, status: InstanceStatus) {
            display("instance {} can not be created with status {:?}", iid, status)
        }

        StatusRegression(iid: InstanceId, from: InstanceStatus, to: InstanceStatus) {
            display("instance {} status can not go from {:?} to {:?}", iid, from, to)
        }

        Immutable(iid: InstanceId) {
            display("instance {} is committed, attributes are immutable", iid)
        }
    }
}
