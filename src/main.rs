mod cli;
mod commands;
mod env_loader;
mod error;
mod linker;
mod logging;

fn main() {
    let dotenv = env_loader::load_dotenv();

    match cli::run(dotenv.as_deref()) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error[{}]: {err:#}", error::error_code(&err));
            std::process::exit(1);
        }
    }
}
