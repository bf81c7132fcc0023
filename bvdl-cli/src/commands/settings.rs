use crate::{cli::SettingsAction, error::Result, settings::Settings};

pub fn run(action: SettingsAction, settings: &mut Settings) -> Result<()> {
    match action {
        SettingsAction::Set { key, value } => {
            settings.set(key.as_str(), value.as_str())?;
            println!("Set {key} to {value}");
        }
        SettingsAction::Get { key } => match settings.get(&key) {
            Some(value) => println!("{key}={value}"),
            None => println!("{key} does not exist"),
        },
        SettingsAction::Remove { key } => match settings.remove(&key)? {
            Some(_) => println!("Removed {key}"),
            None => println!("{key} does not exist"),
        },
        SettingsAction::List => println!("{}", settings.to_pretty_json()?),
    }
    Ok(())
}
