use std::fs;
use std::path::Path;

use crate::backdrop::{BlurConfig, BlurSettings};
use crate::error::AppError;

/// 读取 JSON 设置文件并转换为 `BlurConfig`。文件不存在时返回默认配置。
pub fn load_blur_settings(path: &Path) -> Result<BlurConfig, AppError> {
    if !path.exists() {
        log::info!("未找到设置文件 {}，使用默认模糊配置", path.display());
        return Ok(BlurConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let settings = serde_json::from_str::<BlurSettings>(&content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;

    let config = BlurConfig::from_settings(&settings)?;
    log::debug!("已加载模糊配置: {:?}", config);
    Ok(config)
}

/// 将配置写回 JSON 设置文件，必要时创建父目录。
pub fn save_blur_settings(path: &Path, config: &BlurConfig) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(&config.to_settings())
        .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;

    fs::write(path, content)?;
    Ok(())
}
