use std::sync::Arc;

use tokio::net::TcpListener;

use chalkdb::config::Config;
use chalkdb::executor::Executor;
use chalkdb::heap::HeapStorage;
use chalkdb::server::Server;
use chalkdb::storage::{BufferPool, PageFiles};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    let files = PageFiles::new(&config.data_root);
    files.init().await?;

    let pool = Arc::new(BufferPool::new(files.clone(), config.buffer_size));
    let heap = HeapStorage::new(files, Arc::clone(&pool));
    let executor = Arc::new(Executor::new(heap));

    let listener = TcpListener::bind(config.listen_addr()).await?;
    println!("chalkdb listening on {}", listener.local_addr()?);

    let server = Server::new(listener, executor, &config);

    tokio::select! {
        result = server.serve() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("shutting down");
            match pool.flush_all().await {
                Ok(flushed) => println!("flushed {} dirty pages", flushed),
                Err(e) => eprintln!("flush on shutdown failed: {}", e),
            }
        }
    }

    Ok(())
}
