// ==========================================
// 市场订单接入系统 - 命令行入口
// ==========================================
// 用途: 建库与导入预览的最小命令行界面
// 说明: 交互式确认步骤(映射/动用主池)由上层界面驱动,
//       命令行只覆盖纯读取的预览路径
// ==========================================

use marketplace_oms::api::ImportApi;
use marketplace_oms::db::{init_schema, open_sqlite_connection};
use std::path::PathBuf;
use std::process::ExitCode;

/// 默认数据库路径: <数据目录>/marketplace-oms/orders.db
fn default_db_path() -> String {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("marketplace-oms");
    if let Err(e) = std::fs::create_dir_all(&path) {
        eprintln!("创建数据目录失败: {}", e);
    }
    path.push("orders.db");
    path.display().to_string()
}

fn print_usage() {
    println!("{} v{}", marketplace_oms::APP_NAME, marketplace_oms::VERSION);
    println!();
    println!("用法:");
    println!("  marketplace-oms init [db_path]");
    println!("      初始化数据库(建表,幂等)");
    println!("  marketplace-oms preview <账号> <报表文件.csv|.xlsx> [db_path]");
    println!("      生成导入预览(纯读取,零副作用),JSON 输出");
}

#[tokio::main]
async fn main() -> ExitCode {
    marketplace_oms::logging::init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("init") => {
            let db_path = args.get(2).cloned().unwrap_or_else(default_db_path);
            let conn = match open_sqlite_connection(&db_path) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("打开数据库失败: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = init_schema(&conn) {
                eprintln!("建表失败: {}", e);
                return ExitCode::FAILURE;
            }
            println!("数据库已初始化: {}", db_path);
            ExitCode::SUCCESS
        }
        Some("preview") => {
            let (Some(account), Some(file)) = (args.get(2), args.get(3)) else {
                print_usage();
                return ExitCode::FAILURE;
            };
            let db_path = args.get(4).cloned().unwrap_or_else(default_db_path);

            let api = ImportApi::new(db_path);
            match api.preview_import_file(account, file).await {
                Ok(preview) => {
                    match serde_json::to_string_pretty(&preview) {
                        Ok(json) => println!("{}", json),
                        Err(e) => {
                            eprintln!("序列化预览失败: {}", e);
                            return ExitCode::FAILURE;
                        }
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("预览失败: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        _ => {
            print_usage();
            ExitCode::FAILURE
        }
    }
}
