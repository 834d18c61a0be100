//! CLI subcommands and their handlers.

use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Subcommand};
use color_eyre::{eyre::eyre, Result};

use crate::auth::AuthController;
use crate::cache::{CacheResult, CacheSource};
use crate::catalog::types::{
  ManufacturerDraft, Model, ModelDraft, ModelQuery, Page, PageRequest, PurchaseDetails, SortOrder,
};
use crate::catalog::CachedCatalogClient;

/// Everything a command needs, built once in `main`.
pub struct Context {
  pub auth: AuthController,
  pub catalog: CachedCatalogClient,
  pub default_page_size: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Log in to the catalog
  Login {
    #[arg(short, long)]
    username: String,
    /// Password (falls back to the KITDEX_PASSWORD environment variable)
    #[arg(short, long)]
    password: Option<String>,
  },
  /// Log out and clear the local session
  Logout,
  /// Show the logged-in user
  Whoami,
  /// Browse and manage catalog models
  #[command(subcommand)]
  Models(ModelsCommand),
  /// Manage your favorites
  #[command(subcommand)]
  Favorites(FavoritesCommand),
  /// Manage your purchase records
  #[command(subcommand)]
  Purchases(PurchasesCommand),
  /// Browse and manage manufacturers
  #[command(subcommand)]
  Manufacturers(ManufacturersCommand),
  /// Aggregate collection stats
  Stats,
}

#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
  /// List models with optional filters
  List(ModelListArgs),
  /// Show one model
  Show { id: u64 },
  /// List variants of a model
  Variants { id: u64 },
  /// Add a model to the catalog
  Add(ModelDraftArgs),
  /// Edit a model
  Edit {
    id: u64,
    #[command(flatten)]
    draft: ModelDraftArgs,
  },
  /// Delete a model
  Rm { id: u64 },
}

#[derive(Args, Debug)]
pub struct ModelListArgs {
  #[arg(long)]
  pub search: Option<String>,
  #[arg(long)]
  pub manufacturer: Option<String>,
  #[arg(long)]
  pub series: Option<String>,
  #[arg(long)]
  pub category: Option<String>,
  #[arg(long)]
  pub status: Option<String>,
  #[arg(long)]
  pub sort_by: Option<String>,
  /// asc or desc
  #[arg(long)]
  pub sort_order: Option<String>,
  #[arg(long)]
  pub page: Option<u32>,
  #[arg(long)]
  pub page_size: Option<u32>,
}

#[derive(Args, Debug, Default)]
pub struct ModelDraftArgs {
  #[arg(long)]
  pub name: Option<String>,
  #[arg(long)]
  pub manufacturer_id: Option<u64>,
  #[arg(long)]
  pub parent_id: Option<u64>,
  #[arg(long)]
  pub series: Option<String>,
  #[arg(long)]
  pub category: Option<String>,
  #[arg(long)]
  pub status: Option<String>,
  /// Release date (YYYY-MM-DD)
  #[arg(long)]
  pub release_date: Option<NaiveDate>,
  #[arg(long)]
  pub rating: Option<f64>,
  #[arg(long)]
  pub notes: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum FavoritesCommand {
  /// List your favorites
  List(PageArgs),
  /// Favorite a model
  Add {
    model_id: u64,
    #[arg(long)]
    notes: Option<String>,
  },
  /// Remove a favorite
  Rm { model_id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum PurchasesCommand {
  /// List your purchases
  List(PageArgs),
  /// Mark a model as purchased
  Add {
    model_id: u64,
    /// Purchase date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    notes: Option<String>,
  },
  /// Remove a purchase record
  Rm { model_id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum ManufacturersCommand {
  /// List manufacturers
  List,
  /// Add a manufacturer
  Add {
    #[arg(long)]
    name: String,
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    website: Option<String>,
    #[arg(long)]
    description: Option<String>,
  },
}

#[derive(Args, Debug)]
pub struct PageArgs {
  #[arg(long)]
  pub page: Option<u32>,
  #[arg(long)]
  pub page_size: Option<u32>,
}

impl From<PageArgs> for PageRequest {
  fn from(args: PageArgs) -> Self {
    PageRequest {
      page: args.page,
      page_size: args.page_size,
    }
  }
}

impl TryFrom<ModelListArgs> for ModelQuery {
  type Error = color_eyre::Report;

  fn try_from(args: ModelListArgs) -> Result<Self> {
    let sort_order = match args.sort_order.as_deref() {
      None => None,
      Some("asc") => Some(SortOrder::Asc),
      Some("desc") => Some(SortOrder::Desc),
      Some(other) => return Err(eyre!("sort order must be 'asc' or 'desc', got '{}'", other)),
    };

    Ok(ModelQuery {
      search: args.search,
      manufacturer: args.manufacturer,
      series: args.series,
      category: args.category,
      status: args.status,
      sort_by: args.sort_by,
      sort_order,
      page: args.page,
      page_size: args.page_size,
    })
  }
}

impl From<ModelDraftArgs> for ModelDraft {
  fn from(args: ModelDraftArgs) -> Self {
    ModelDraft {
      parent_id: args.parent_id,
      manufacturer_id: args.manufacturer_id,
      series: args.series,
      name: args.name,
      status: args.status,
      category: args.category,
      release_date: args.release_date,
      rating: args.rating,
      notes: args.notes,
    }
  }
}

/// Run one command against the context. After the command, any pending
/// unauthorized notices are applied so an expired session ends cleanly.
pub async fn run(ctx: &mut Context, command: Command) -> Result<()> {
  let outcome = dispatch(ctx, command).await;

  if ctx.auth.drain_unauthorized() {
    eprintln!("Your session was rejected by the server; you have been logged out.");
  }

  outcome
}

async fn dispatch(ctx: &mut Context, command: Command) -> Result<()> {
  match command {
    Command::Login { username, password } => login(ctx, &username, password).await,
    Command::Logout => {
      ctx.auth.logout();
      println!("Logged out.");
      Ok(())
    }
    Command::Whoami => whoami(ctx).await,
    Command::Models(cmd) => models(ctx, cmd).await,
    Command::Favorites(cmd) => favorites(ctx, cmd).await,
    Command::Purchases(cmd) => purchases(ctx, cmd).await,
    Command::Manufacturers(cmd) => manufacturers(ctx, cmd).await,
    Command::Stats => stats(ctx).await,
  }
}

fn require_auth(auth: &AuthController) -> Result<()> {
  if auth.is_authenticated() {
    Ok(())
  } else {
    Err(eyre!("Not logged in. Run `kitdex login` first."))
  }
}

async fn login(ctx: &mut Context, username: &str, password: Option<String>) -> Result<()> {
  let password = match password {
    Some(p) => p,
    None => std::env::var("KITDEX_PASSWORD")
      .map_err(|_| eyre!("No password given. Pass --password or set KITDEX_PASSWORD."))?,
  };

  let user = ctx.auth.login(username, &password).await?;
  println!("Logged in as {}.", user.username);
  Ok(())
}

async fn whoami(ctx: &mut Context) -> Result<()> {
  require_auth(&ctx.auth)?;
  let result = ctx.catalog.profile().await?;
  let user = &result.data;
  println!("{} (id {})", user.username, user.id);
  println!("member since {}", user.created_at.format("%Y-%m-%d"));
  Ok(())
}

async fn models(ctx: &mut Context, cmd: ModelsCommand) -> Result<()> {
  require_auth(&ctx.auth)?;
  match cmd {
    ModelsCommand::List(args) => {
      let mut query = ModelQuery::try_from(args)?;
      query.page_size = query.page_size.or(ctx.default_page_size);
      let result = ctx.catalog.models(&query).await?;
      print_model_page(&result);
    }
    ModelsCommand::Show { id } => {
      let result = ctx.catalog.model(id).await?;
      print_model_detail(&result.data);
      print_source_note(&result);
    }
    ModelsCommand::Variants { id } => {
      let result = ctx.catalog.model_variants(id).await?;
      if result.data.is_empty() {
        println!("No variants.");
      }
      for model in &result.data {
        print_model_line(model);
      }
      print_source_note(&result);
    }
    ModelsCommand::Add(args) => {
      let model = ctx.catalog.create_model(&args.into()).await?;
      println!("Created model {} ({}).", model.name, model.id);
    }
    ModelsCommand::Edit { id, draft } => {
      let model = ctx.catalog.update_model(id, &draft.into()).await?;
      println!("Updated model {} ({}).", model.name, model.id);
    }
    ModelsCommand::Rm { id } => {
      ctx.catalog.delete_model(id).await?;
      println!("Deleted model {}.", id);
    }
  }
  Ok(())
}

async fn favorites(ctx: &mut Context, cmd: FavoritesCommand) -> Result<()> {
  require_auth(&ctx.auth)?;
  match cmd {
    FavoritesCommand::List(args) => {
      let mut paging = PageRequest::from(args);
      paging.page_size = paging.page_size.or(ctx.default_page_size);
      let result = ctx.catalog.favorites(&paging).await?;
      print_model_page(&result);
    }
    FavoritesCommand::Add { model_id, notes } => {
      ctx.catalog.add_favorite(model_id, notes).await?;
      println!("Favorited model {}.", model_id);
    }
    FavoritesCommand::Rm { model_id } => {
      ctx.catalog.remove_favorite(model_id).await?;
      println!("Removed favorite {}.", model_id);
    }
  }
  Ok(())
}

async fn purchases(ctx: &mut Context, cmd: PurchasesCommand) -> Result<()> {
  require_auth(&ctx.auth)?;
  match cmd {
    PurchasesCommand::List(args) => {
      let mut paging = PageRequest::from(args);
      paging.page_size = paging.page_size.or(ctx.default_page_size);
      let result = ctx.catalog.purchases(&paging).await?;
      print_model_page(&result);
    }
    PurchasesCommand::Add {
      model_id,
      date,
      price,
      notes,
    } => {
      let details = PurchaseDetails {
        purchased_date: date,
        purchased_price: price,
        purchase_notes: notes,
      };
      ctx.catalog.add_purchase(model_id, details).await?;
      println!("Marked model {} as purchased.", model_id);
    }
    PurchasesCommand::Rm { model_id } => {
      ctx.catalog.remove_purchase(model_id).await?;
      println!("Removed purchase record for model {}.", model_id);
    }
  }
  Ok(())
}

async fn manufacturers(ctx: &mut Context, cmd: ManufacturersCommand) -> Result<()> {
  require_auth(&ctx.auth)?;
  match cmd {
    ManufacturersCommand::List => {
      let result = ctx.catalog.manufacturers().await?;
      for manufacturer in &result.data {
        let country = manufacturer.country.as_deref().unwrap_or("-");
        println!("{:>5}  {:<24} {}", manufacturer.id, manufacturer.name, country);
      }
      print_source_note(&result);
    }
    ManufacturersCommand::Add {
      name,
      full_name,
      country,
      website,
      description,
    } => {
      let draft = ManufacturerDraft {
        name,
        full_name,
        country,
        website,
        description,
      };
      let manufacturer = ctx.catalog.create_manufacturer(&draft).await?;
      println!(
        "Created manufacturer {} ({}).",
        manufacturer.name, manufacturer.id
      );
    }
  }
  Ok(())
}

async fn stats(ctx: &mut Context) -> Result<()> {
  require_auth(&ctx.auth)?;

  let wide_page = PageRequest {
    page: Some(1),
    page_size: Some(100),
  };
  let count_only = ModelQuery {
    page: Some(1),
    page_size: Some(1),
    ..Default::default()
  };

  let (models, favorites, purchases) = futures::try_join!(
    ctx.catalog.models(&count_only),
    ctx.catalog.favorites(&wide_page),
    ctx.catalog.purchases(&wide_page),
  )?;

  let now = Utc::now();
  let purchased_this_month = purchases
    .data
    .data
    .iter()
    .flat_map(|m| &m.user_purchases)
    .filter_map(|p| p.purchased_date)
    .filter(|d| d.year() == now.year() && d.month() == now.month())
    .count();
  let total_spend: f64 = purchases
    .data
    .data
    .iter()
    .flat_map(|m| &m.user_purchases)
    .filter_map(|p| p.purchased_price)
    .sum();

  println!("Catalog models:     {}", models.data.total);
  println!("Favorites:          {}", favorites.data.total);
  println!("Purchases:          {}", purchases.data.total);
  println!("Bought this month:  {}", purchased_this_month);
  println!("Total spend:        {:.2}", total_spend);
  Ok(())
}

fn print_model_page(result: &CacheResult<Page<Model>>) {
  let page = &result.data;
  for model in &page.data {
    print_model_line(model);
  }
  println!(
    "page {} of {} ({} total)",
    page.page, page.total_pages, page.total
  );
  print_source_note(result);
}

fn print_model_line(model: &Model) {
  let manufacturer = model
    .manufacturer
    .as_ref()
    .map(|m| m.name.as_str())
    .unwrap_or("-");
  let series = model.series.as_deref().unwrap_or("-");
  println!(
    "{:>5}  {:<32} {:<16} {:<14} {:<10} {}",
    model.id, model.name, manufacturer, series, model.category, model.status
  );
}

fn print_model_detail(model: &Model) {
  println!("{} (id {})", model.name, model.id);
  if let Some(manufacturer) = &model.manufacturer {
    println!("manufacturer: {}", manufacturer.name);
  }
  if let Some(series) = &model.series {
    println!("series:       {}", series);
  }
  println!("category:     {}", model.category);
  println!("status:       {}", model.status);
  if let Some(date) = model.release_date {
    println!("released:     {}", date);
  }
  if let Some(rating) = model.rating {
    println!("rating:       {:.1}", rating);
  }
  if let Some(notes) = &model.notes {
    println!("notes:        {}", notes);
  }
  if !model.children.is_empty() {
    println!("variants:     {}", model.children.len());
  }
}

/// Flag non-network data so a failed refresh is visible, not silent.
fn print_source_note<T>(result: &CacheResult<T>) {
  match result.source {
    CacheSource::Network => {}
    CacheSource::CacheFresh => println!("(cached)"),
    CacheSource::CacheStale => {
      let reason = result
        .error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "refresh failed".to_string());
      eprintln!("(showing cached data: {})", reason);
    }
  }
}
