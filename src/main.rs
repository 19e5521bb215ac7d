use std::io::{BufRead, Write};

use hooktrack::bridge::FridaBridge;
use hooktrack::console::Console;
use hooktrack::jobs::{JobManager, JobStatus, JobType};
use hooktrack::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("attach") => {
            let Some(pid) = args.get(2).and_then(|s| s.parse::<u32>().ok()) else {
                eprintln!("Usage: hooktrack attach <pid>");
                std::process::exit(1);
            };
            run(pid).await
        }
        _ => {
            eprintln!("Usage: hooktrack attach <pid>");
            std::process::exit(1);
        }
    }
}

async fn run(pid: u32) -> Result<()> {
    let settings = hooktrack::config::resolve(None);
    let manager = JobManager::with_settings(&settings);
    let bridge = FridaBridge::new(manager.clone());
    bridge.attach(pid).await?;
    let console = Console::new(manager.clone(), settings);

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = parts.first() else { continue };

        match cmd {
            "jobs" => {
                let status = parts.get(1).and_then(|s| s.parse::<JobStatus>().ok());
                console.jobs(status);
            }
            "job" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                Some(id) => {
                    console.job(id);
                }
                None => eprintln!("Usage: job <id>"),
            },
            "kill" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                Some(id) => {
                    console.kill(id);
                }
                None => eprintln!("Usage: kill <id>"),
            },
            "killall" => {
                let job_type = parts.get(1).and_then(|s| s.parse::<JobType>().ok());
                console.killall(job_type);
            }
            "pause" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                Some(id) => {
                    console.pause(id);
                }
                None => eprintln!("Usage: pause <id>"),
            },
            "resume" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                Some(id) => {
                    console.resume(id);
                }
                None => eprintln!("Usage: resume <id>"),
            },
            "stats" => {
                console.jobstats();
            }
            "history" => {
                let limit = parts.get(1).and_then(|s| s.parse::<usize>().ok());
                console.history(limit);
            }
            "cleanup" => {
                console.cleanup();
            }
            "export" => {
                console.export_jobs();
            }
            "hook-java" => match (parts.get(1), parts.get(2)) {
                (Some(class), Some(method)) => {
                    if let Err(e) = bridge.hook_java_method(&manager, class, method).await {
                        eprintln!("{}", e);
                    }
                }
                _ => eprintln!("Usage: hook-java <class> <method>"),
            },
            "hook-native" => match (parts.get(1), parts.get(2)) {
                (Some(module), Some(export)) => {
                    if let Err(e) = bridge.hook_native_export(&manager, module, export).await {
                        eprintln!("{}", e);
                    }
                }
                _ => eprintln!("Usage: hook-native <module> <export>"),
            },
            "quit" | "exit" => break,
            "help" => {
                println!("commands:");
                println!("  jobs [status]               list live jobs");
                println!("  job <id>                    show one job");
                println!("  kill <id>                   cancel a job");
                println!("  killall [type]              cancel all (matching) jobs");
                println!("  pause <id> / resume <id>    suspend / restart monitoring");
                println!("  stats                       aggregate counts");
                println!("  history [n]                 recent job history");
                println!("  cleanup                     drop terminal records");
                println!("  export                      write registry snapshot to disk");
                println!("  hook-java <class> <method>  hook a Java method");
                println!("  hook-native <module> <exp>  hook a native export");
                println!("  quit");
            }
            _ => eprintln!("Unknown command '{}' (try 'help')", cmd),
        }
    }

    bridge.stop().await?;
    Ok(())
}
