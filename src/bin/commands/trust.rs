use clap::Args;
use yolo::errors::Result;
use yolo::orchestrator::Home;
use yolo::overlay::TrustStore;

#[derive(Args, Debug)]
pub struct ListTrust {}

impl ListTrust {
    pub fn run(self) -> Result<()> {
        let home = Home::discover()?;
        let store = TrustStore::new(home.trust_list());
        for hash in store.list()? {
            println!("{hash}");
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RevokeTrust {
    /// The overlay content hash to revoke, as printed by `yolo-util trust list`.
    pub hash: String,
}

impl RevokeTrust {
    pub fn run(self) -> Result<()> {
        let home = Home::discover()?;
        let store = TrustStore::new(home.trust_list());
        store.revoke(&self.hash)?;
        println!("revoked {}", self.hash);
        Ok(())
    }
}
