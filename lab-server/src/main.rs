//! 实验室服务主程序

mod seed;

use anyhow::Result;
use clap::Parser;
use lab_admin::{init_logging, ConfigManager};
use lab_workflow::LabService;
use std::path::PathBuf;
use tracing::{error, info};

/// 实验室服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "lab-server")]
#[command(about = "临床实验室申请单与结果录入服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// JSON初始数据文件，未指定时加载内置演示数据
    #[arg(short, long)]
    seed: Option<PathBuf>,

    /// 将生效配置写入该路径
    #[arg(long)]
    save_config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_manager = ConfigManager::new(args.config.as_deref())?;
    let config = config_manager.get_config().await;

    // 初始化日志
    init_logging(&config.logging, args.log_level.as_deref())?;

    info!("启动实验室服务: {}", config.laboratorio.nome);

    if let Some(path) = &args.save_config {
        config_manager.save_to(path).await?;
    }

    let service = LabService::new(config.service_settings());

    let seed = match &args.seed {
        Some(path) => seed::SeedFile::load(path).await?,
        None => seed::built_in_seed(),
    };

    let requisicao_ids = match seed::apply_seed(&service, &seed).await {
        Ok(ids) => ids,
        Err(e) => {
            error!("初始数据加载失败: {:#}", e);
            return Err(e);
        }
    };

    for requisicao_id in requisicao_ids {
        let snapshot = service.export_snapshot(requisicao_id).await?;
        info!(
            "Requisicao {} ({}): {} resultados",
            requisicao_id,
            snapshot.requisicao.status,
            snapshot.recorded_count()
        );
        println!("{}", snapshot.to_json()?);
    }

    Ok(())
}
