use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, EvictParams};
use kube::error::ErrorResponse;
use kube::{Api, Client, ResourceExt};

/// The slice of the cluster API the drain core talks to.
///
/// Kept object safe so tests can substitute a scripted implementation.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Submits an eviction for the pod with the given termination grace.
    async fn evict_pod(&self, pod: &Pod, grace_period_seconds: i64) -> kube::Result<()>;

    /// Deletes the pod outright, bypassing eviction mediation.
    async fn delete_pod(&self, pod: &Pod) -> kube::Result<()>;

    /// Fetches the pod's current state.
    async fn get_pod(&self, pod: &Pod) -> kube::Result<Pod>;
}

pub fn is_not_found_error(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ErrorResponse { code: 404, .. }))
}

/// Production [`ClusterApi`] backed by the API server.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,

    /// For namespace isolated test.
    namespace: Option<String>,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            namespace: None,
        }
    }

    pub fn new_within(client: Client, ns: &str) -> Self {
        Self {
            client,
            namespace: Some(String::from(ns)),
        }
    }

    fn pod_api(&self, pod: &Pod) -> Api<Pod> {
        if let Some(ns) = pod.namespace().as_deref().or(self.namespace.as_deref()) {
            Api::namespaced(self.client.clone(), ns)
        } else {
            Api::default_namespaced(self.client.clone())
        }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn evict_pod(&self, pod: &Pod, grace_period_seconds: i64) -> kube::Result<()> {
        let params = EvictParams {
            delete_options: Some(DeleteParams {
                grace_period_seconds: Some(grace_period_seconds.max(0) as u32),
                ..DeleteParams::default()
            }),
            ..EvictParams::default()
        };

        self.pod_api(pod).evict(&pod.name_any(), &params).await?;
        Ok(())
    }

    async fn delete_pod(&self, pod: &Pod) -> kube::Result<()> {
        self.pod_api(pod)
            .delete(&pod.name_any(), &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn get_pod(&self, pod: &Pod) -> kube::Result<Pod> {
        self.pod_api(pod).get(&pod.name_any()).await
    }
}
