use anyhow::{Context, Result};
use gently_api::{create_app, AppState};
use gently_core::models::{QueueSnapshot, RegistrySnapshot};
use gently_core::AppConfig;
use gently_domain::{ExperimentQueue, MicroscopeRegistry};
use gently_infrastructure::{JsonFileStore, NotificationService};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

/// 主应用程序
pub struct Application {
    config: AppConfig,
    state: AppState,
}

impl Application {
    /// 加载队列和注册表快照，创建通知服务
    pub fn new(config: AppConfig) -> Result<Self> {
        info!(
            "初始化应用程序，队列文件: {}，注册表文件: {}",
            config.storage.queue_path, config.storage.registry_path
        );

        let queue_store = JsonFileStore::<QueueSnapshot>::new(&config.storage.queue_path);
        let queue = ExperimentQueue::open(Box::new(queue_store))
            .with_context(|| format!("加载实验队列失败: {}", config.storage.queue_path))?;

        let registry_store =
            JsonFileStore::<RegistrySnapshot>::new(&config.storage.registry_path);
        let registry = MicroscopeRegistry::open(Box::new(registry_store))
            .with_context(|| format!("加载显微镜注册表失败: {}", config.storage.registry_path))?;

        let notifications = NotificationService::from_config(config.notifications.clone())
            .context("创建通知服务失败")?;

        Ok(Self {
            state: AppState::new(queue, registry, notifications),
            config,
        })
    }

    /// 启动API服务器，收到关闭信号后停止接收新连接并等待进行中的请求完成
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let app = create_app(self.state.clone(), &self.config.api);

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定API地址失败: {}", self.config.api.bind_address))?;

        info!("API服务器启动在: {}", self.config.api.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器停止接收新请求");
            })
            .await
            .context("API服务器运行失败")?;

        info!("API服务器已关闭");
        Ok(())
    }
}
