use anyhow::{Context, Result};
use std::sync::Arc;

use reedline::{DefaultCompleter, DefaultHinter, DefaultPrompt, Reedline, Signal};

use crate::agent::{provision, teardown, Agent, ApiClient, Deployment, Reply, SessionManager};
use crate::config::Config;
use crate::tools::FunctionRegistry;

fn print_help() {
    println!("🤖 agentlink - 托管 Agent 的本地工具执行器");
    println!();
    println!("用法：agentlink <命令>");
    println!();
    println!("命令:");
    println!("  onboard         初始化配置");
    println!("  setup           在远端创建 LLM、agent 和工具");
    println!("  teardown        删除 setup 创建的远端资源");
    println!("  agent           进入交互模式");
    println!("  ask <问题>      单次提问");
    println!("  tools           列出本地工具");
    println!("  session         会话管理");
    println!("  help            显示此帮助信息");
    println!();
    println!("交互模式命令:");
    print_repl_help();
    println!("Session 子命令:");
    println!("  session list        - 列出所有会话");
    println!("  session delete <ID> - 删除会话");
    println!();
    println!("环境变量:");
    println!("  AGENTLINK_API_KEY   托管 API 的 key");
    println!("  AGENTLINK_API_URL   托管 API 地址");
    println!("  OPENAI_API_KEY      setup 时注册的 LLM key");
    println!("  RUST_LOG            日志级别，例如 agentlink=debug");
}

fn print_repl_help() {
    println!("  /clear    - 清空当前会话记录");
    println!("  /new [名] - 创建新会话");
    println!("  /quit     - 退出");
    println!();
}

fn registry_for(config: &Config) -> FunctionRegistry {
    FunctionRegistry::with_builtins(config.workspace.root.clone())
}

fn print_reply(reply: &Reply) {
    for step in &reply.steps {
        println!("🔧 {}", step.outcome.summary(&step.tool));
    }
    println!("🤖 AI: {}\n", reply.output);
}

/// Onboard 命令 - 生成默认配置和目录
fn run_onboard() -> Result<()> {
    println!("🚀 初始化 agentlink 配置...\n");

    let config = Config::default();
    config
        .ensure_workspace()
        .context("创建 workspace 目录失败")?;
    config.ensure_sessions().context("创建 sessions 目录失败")?;

    println!("✅ 创建目录:");
    println!("   Workspace: {}", config.workspace.root.display());
    println!("   Sessions:  {}", config.session.storage_path.display());
    println!();

    let path = Config::default_path();
    if path.exists() {
        println!("ℹ️ 配置文件已存在，未覆盖：{}", path.display());
    } else {
        // key 只从环境变量读取，不写入文件
        let mut to_save = config.clone();
        to_save.api.api_key = None;
        to_save.agent.llm_api_key = None;
        to_save.save(&path).context("保存配置文件失败")?;
        println!("✅ 保存配置：{}", path.display());
    }
    println!();
    println!("下一步：设置 AGENTLINK_API_KEY 和 OPENAI_API_KEY，然后运行 'agentlink setup'");

    Ok(())
}

/// Setup 命令 - 创建远端资源并记录到 deployment.toml
async fn run_setup() -> Result<()> {
    let config = Config::load_default()?;
    config.ensure_workspace()?;

    let deployment_path = config.deployment_path();
    if let Some(existing) = Deployment::load(&deployment_path)? {
        println!("ℹ️ 已存在部署：agent {}", existing.agent_id);
        println!("   如需重建，请先运行 'agentlink teardown'");
        return Ok(());
    }

    let client = ApiClient::new(config.api.clone())?;
    let registry = registry_for(&config);

    println!("🚀 正在创建远端资源（{} 个工具）...", registry.len());
    let deployment = provision(&client, &config.agent, &registry).await?;
    deployment.save(&deployment_path)?;

    println!("✅ LLM:   {}", deployment.llm_id);
    println!("✅ Agent: {}", deployment.agent_id);
    for (name, id) in &deployment.tools {
        println!("✅ 工具 {} -> {}", name, id);
    }
    println!("📁 部署记录：{}", deployment_path.display());

    Ok(())
}

async fn run_teardown() -> Result<()> {
    let config = Config::load_default()?;
    let deployment_path = config.deployment_path();

    let Some(mut deployment) = Deployment::load(&deployment_path)? else {
        println!("📭 没有部署记录");
        return Ok(());
    };

    let client = ApiClient::new(config.api.clone())?;
    let agent_id = deployment.agent_id.clone();
    let failures = teardown(&client, &mut deployment).await;

    if failures > 0 || !deployment.is_empty() {
        deployment.save(&deployment_path)?;
        println!("⚠️ {} 个资源删除失败，剩余资源已写回部署记录，可重新运行 teardown", failures);
        return Ok(());
    }

    std::fs::remove_file(&deployment_path)?;
    println!("✅ 已删除 agent {} 及其工具和 LLM", agent_id);
    Ok(())
}

fn run_tools() -> Result<()> {
    let config = Config::load_default()?;
    let registry = registry_for(&config);
    let deployment = Deployment::load(&config.deployment_path())?;

    println!("🔧 本地工具:");
    for spec in registry.specs() {
        let remote = deployment
            .as_ref()
            .and_then(|d| d.tools.get(&spec.function_name))
            .map(String::as_str)
            .unwrap_or("(未注册)");
        println!("  {:<10} {}  [{}]", spec.function_name, spec.description, remote);
    }
    Ok(())
}

fn load_agent(config: Config) -> Result<Agent> {
    let deployment = Deployment::load(&config.deployment_path())?
        .context("尚未部署，请先运行 'agentlink setup'")?;
    config.ensure_sessions()?;

    let client = ApiClient::new(config.api.clone())?;
    let registry = Arc::new(registry_for(&config));

    Ok(Agent::new(
        client,
        deployment,
        registry,
        config.agent.max_tool_calls,
        config.session,
    ))
}

async fn run_ask(args: &[String]) -> Result<()> {
    let question = args.join(" ");
    if question.trim().is_empty() {
        eprintln!("❌ 请输入问题");
        eprintln!("用法：agentlink ask <问题>");
        std::process::exit(1);
    }

    let mut agent = load_agent(Config::load_default()?)?;
    let reply = agent.ask(&question).await?;
    print_reply(&reply);
    Ok(())
}

fn run_session(args: &[String]) -> Result<()> {
    let Some(subcommand) = args.first().map(|s| s.to_lowercase()) else {
        eprintln!("❌ 请指定 session 子命令");
        eprintln!();
        eprintln!("用法：agentlink session <list|delete> [ID]");
        std::process::exit(1);
    };

    let config = Config::load_default()?;
    config.ensure_sessions()?;
    let mut manager = SessionManager::new(config.session.storage_path);
    manager.load_all()?;

    match subcommand.as_str() {
        "list" | "l" => {
            let sessions = manager.list();
            if sessions.is_empty() {
                println!("📭 暂无会话");
                return Ok(());
            }

            println!("📋 会话列表:");
            println!();
            for session in sessions {
                let short_id = session.id().get(..8).unwrap_or(session.id());
                println!("{} - {}", short_id, session.name().unwrap_or("(未命名)"));
                println!(
                    "   创建时间：{} | 轮数：{} | agent：{}",
                    session.created_at().format("%Y-%m-%d %H:%M"),
                    session.turns().len(),
                    session.agent_id()
                );
                println!();
            }
            Ok(())
        }
        "delete" | "rm" => {
            let Some(id) = args.get(1) else {
                eprintln!("❌ 请指定会话 ID");
                eprintln!("用法：agentlink session delete <ID>");
                std::process::exit(1);
            };

            let Some(matched) = manager.resolve(id).map(str::to_string) else {
                eprintln!("❌ 会话不存在或 ID 前缀不唯一：{}", id);
                std::process::exit(1);
            };

            manager.delete(&matched)?;
            println!("✅ 已删除会话：{}", matched);
            Ok(())
        }
        _ => {
            eprintln!("❌ 未知子命令：{}", subcommand);
            std::process::exit(1);
        }
    }
}

/// Agent 命令 - 交互式对话
async fn run_agent() -> Result<()> {
    let config = Config::load_default()?;
    let mut agent = load_agent(config.clone())?;

    println!("🤖 agentlink 交互模式");
    println!("🤖 Agent：{}", agent.deployment().agent_id);
    println!("📁 Workspace: {}", config.workspace.root.display());
    if let Some(session_id) = agent.current_session_id() {
        println!("📝 当前会话：{}", session_id);
    }
    println!("输入 /help 查看帮助\n");

    let mut line_editor = Reedline::create()
        .with_hinter(Box::new(DefaultHinter::default()))
        .with_completer(Box::new(DefaultCompleter::default()));
    let prompt = DefaultPrompt::default();

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => {
                let input = buffer.trim();
                if input.is_empty() {
                    continue;
                }

                if input.starts_with('/') {
                    let parts: Vec<&str> = input.split_whitespace().collect();
                    let cmd = parts.first().map(|s| s.to_lowercase()).unwrap_or_default();

                    match cmd.as_str() {
                        "/quit" | "/exit" => {
                            println!("👋 再见！");
                            break;
                        }
                        "/clear" => {
                            match agent.clear_history() {
                                Ok(()) => println!("✅ 已清空当前会话记录\n"),
                                Err(e) => println!("❌ 清空失败：{:#}\n", e),
                            }
                        }
                        "/new" => {
                            let name = parts.get(1).map(|s| s.to_string());
                            let id = agent.new_session(name);
                            println!("✅ 已创建新会话：{}\n", id);
                        }
                        "/help" | "/h" => print_repl_help(),
                        _ => {
                            println!("❌ 未知命令：{}", input);
                            println!("输入 /help 查看帮助\n");
                        }
                    }
                    continue;
                }

                match agent.ask(input).await {
                    Ok(reply) => print_reply(&reply),
                    Err(e) => println!("❌ 错误：{:#}\n", e),
                }
            }
            Signal::CtrlD => {
                println!("\n👋 再见！");
                break;
            }
            Signal::CtrlC => {
                println!("\n输入 /quit 退出，或继续输入问题");
            }
        }
    }

    Ok(())
}

/// 主入口函数
pub async fn run_cli() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let Some(command) = args.get(1).map(|s| s.to_lowercase()) else {
        print_help();
        return Ok(());
    };
    let rest = &args[2..];

    match command.as_str() {
        "agent" | "a" => run_agent().await,
        "ask" => run_ask(rest).await,
        "setup" => run_setup().await,
        "teardown" => run_teardown().await,
        "tools" | "t" => run_tools(),
        "session" | "s" => run_session(rest),
        "onboard" => run_onboard(),
        "help" | "-h" | "--help" | "h" => {
            print_help();
            Ok(())
        }
        _ => {
            eprintln!("❌ 未知命令：{}", command);
            eprintln!();
            eprintln!("运行 'agentlink help' 查看帮助信息");
            std::process::exit(1);
        }
    }
}
